pub mod adsr;
pub mod filter;
pub mod follower;

// Intentionally do not re-export; import concrete types where needed
