pub mod macros;
pub mod nobidreason;
pub mod nobidreasons;
