pub mod address;
pub mod alert;
pub mod bid;
pub mod capability;
pub mod job;
pub mod vendor;

pub use address::{Address, AddressInput, Coordinate};
pub use alert::{Alert, AlertMeta, Severity};
pub use bid::{Bid, BidSubmission};
pub use capability::{Capability, CapabilityRole};
pub use job::{BidMode, Job, JobDraft, JobStatus, Priority};
pub use vendor::{normalize_phone, Vendor, VendorCapabilities};
