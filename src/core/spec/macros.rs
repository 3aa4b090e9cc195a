/// Declares a list of numeric spec codes with their display names,
/// plus a `describe()` lookup for logging and analytics output
#[macro_export]
macro_rules! spec_list {
    ($($(#[$meta:meta])* $name:ident = $code:expr => $desc:expr,)+) => {
        $(
            $(#[$meta])*
            pub const $name: u32 = $code;
        )+

        pub fn describe(code: u32) -> &'static str {
            match code {
                $($code => $desc,)+
                _ => "Unknown",
            }
        }
    };
}
