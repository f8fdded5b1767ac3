use once_cell::sync::Lazy;
use regex::Regex;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

static ADDRESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("address pattern compiles"));

/// `0x` followed by exactly 40 hex digits, either case.
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_PATTERN.is_match(address)
}

pub fn is_non_zero_address(address: &str) -> bool {
    !address.eq_ignore_ascii_case(ZERO_ADDRESS)
}

/// A token address worth looking up or linking.
pub fn is_linkable_address(address: &str) -> bool {
    is_valid_address(address) && is_non_zero_address(address)
}
