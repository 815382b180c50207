pub mod asana;
pub mod clubhouse;
