mod status;

pub use status::ElectionStatus;
