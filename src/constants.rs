//! Capability bits and fixed names

// Capability bit constants
pub const VIEW_ALL_USERS: u64 = 1;
pub const CREATE_USER: u64 = 1 << 1;
pub const MANAGE_PRIVILEGES: u64 = 1 << 2;
pub const DELETE_USER: u64 = 1 << 3;
pub const BLOCK_USER: u64 = 1 << 4;
pub const SEND_RESET_PASSWORD_EMAIL: u64 = 1 << 5;

// Capabilities that touch user data and therefore need VIEW_ALL_USERS
pub const REQUIRES_VIEW: u64 =
    CREATE_USER | MANAGE_PRIVILEGES | DELETE_USER | BLOCK_USER | SEND_RESET_PASSWORD_EMAIL;

pub const ALL_CAPS: u64 = VIEW_ALL_USERS | REQUIRES_VIEW;

// Singleton records
pub const DEFAULT_NAME: &str = "Default";
pub const ROOT_NAME: &str = "Root";

// Metadata key carrying the caller credential
pub const TOKEN_KEY: &str = "token";

// Default LMDB collection names
pub const PRIVILEGES_DB: &str = "privileges";
pub const USERS_DB: &str = "users";

// Capability name mappings
const CAPS: &[(&str, u64)] = &[
    ("view_all_users", VIEW_ALL_USERS),
    ("create_user", CREATE_USER),
    ("manage_privileges", MANAGE_PRIVILEGES),
    ("delete_user", DELETE_USER),
    ("block_user", BLOCK_USER),
    ("send_reset_password_email", SEND_RESET_PASSWORD_EMAIL),
];

/// Convert a capability mask to a list of capability names
pub fn caps_to_names(mask: u64) -> Vec<&'static str> {
    CAPS.iter()
        .filter(|(_, b)| mask & b == *b)
        .map(|(n, _)| *n)
        .collect()
}
