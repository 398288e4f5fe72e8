pub mod accounts;
pub mod mail;
pub mod series;
