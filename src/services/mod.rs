// Order lifecycle
pub mod checkout;
pub mod orders;

// Authorization
pub mod store_access;

// Accounts
pub mod users;

// External adapters
pub mod delivery;
pub mod payments;
