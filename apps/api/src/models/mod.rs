pub mod question;
pub mod test;
