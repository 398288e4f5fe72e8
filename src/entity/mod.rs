pub mod environmental_data;
pub mod users;
pub mod verification_requests;
