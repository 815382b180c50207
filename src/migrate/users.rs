use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::asana::User;
use crate::model::clubhouse::Member;

/// Asana profile links in comment text carry a task-list id rather than the
/// user gid; the two only share a leading prefix of this many digits.
pub const MENTION_ID_PREFIX_LEN: usize = 8;

static PROFILE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://app\.asana\.com/0/(\d+)/list").expect("profile link pattern is valid")
});

struct MentionTarget {
    asana_name: String,
    member: Option<Member>,
}

/// Asana user to Clubhouse member lookup, matched by email address.
pub struct UserDirectory {
    members_by_asana_gid: HashMap<String, Member>,
    mentions: HashMap<String, MentionTarget>,
}

impl UserDirectory {
    pub fn build(asana_users: &[User], members: &[Member], ignore_email_domain: bool) -> Self {
        let members_by_email: HashMap<String, &Member> = members
            .iter()
            .filter_map(|m| {
                let email = m.profile.email_address.as_deref()?;
                Some((normalize_email(email, ignore_email_domain), m))
            })
            .collect();

        let mut members_by_asana_gid = HashMap::new();
        let mut mentions = HashMap::new();
        for user in asana_users {
            let member = user
                .email
                .as_deref()
                .map(|e| normalize_email(e, ignore_email_domain))
                .and_then(|e| members_by_email.get(&e))
                .map(|m| (*m).clone());

            if let Some(member) = &member {
                members_by_asana_gid.insert(user.gid.clone(), member.clone());
            }
            mentions.insert(
                mention_prefix(&user.gid).to_string(),
                MentionTarget {
                    asana_name: user.name.clone(),
                    member,
                },
            );
        }

        tracing::debug!(
            matched = members_by_asana_gid.len(),
            asana_users = asana_users.len(),
            members = members.len(),
            "built user mapping"
        );

        Self {
            members_by_asana_gid,
            mentions,
        }
    }

    pub fn member_id(&self, user: Option<&User>) -> Option<String> {
        let user = user?;
        match self.members_by_asana_gid.get(&user.gid) {
            Some(member) => Some(member.id.clone()),
            None => {
                let email = user.email.as_deref().unwrap_or("unknown");
                tracing::warn!("The Asana user '{email}' does not exist in Clubhouse");
                None
            }
        }
    }

    pub fn member_ids<'a>(&self, users: impl IntoIterator<Item = &'a User>) -> Vec<String> {
        users
            .into_iter()
            .filter_map(|u| self.member_id(Some(u)))
            .collect()
    }

    /// Rewrite Asana profile links into Clubhouse mentions. Users without a
    /// Clubhouse account keep a link labelled with their Asana name.
    pub fn rewrite_mentions(&self, text: &str) -> String {
        PROFILE_LINK
            .replace_all(text, |caps: &Captures| {
                let link = &caps[0];
                match self.mentions.get(mention_prefix(&caps[1])) {
                    None => format!("[User unknown]({link})"),
                    Some(MentionTarget {
                        asana_name,
                        member: None,
                    }) => format!("[{asana_name}]({link})"),
                    Some(MentionTarget {
                        member: Some(member),
                        ..
                    }) => {
                        let profile_id = member.profile.id.as_deref().unwrap_or(&member.id);
                        format!(
                            "[@{}](clubhouse://members/{profile_id})",
                            member.profile.mention_name
                        )
                    }
                }
            })
            .into_owned()
    }
}

fn mention_prefix(gid: &str) -> &str {
    let end = gid
        .char_indices()
        .nth(MENTION_ID_PREFIX_LEN)
        .map_or(gid.len(), |(i, _)| i);
    &gid[..end]
}

fn normalize_email(email: &str, ignore_domain: bool) -> String {
    let email = email.trim();
    let email = if ignore_domain {
        email.split('@').next().unwrap_or(email)
    } else {
        email
    };
    email.to_lowercase()
}
