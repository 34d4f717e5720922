pub mod correlation;
pub mod descriptive;
pub mod hypothesis;
pub mod robust;
pub mod spectral;
