pub mod accounts;
pub mod battles;
