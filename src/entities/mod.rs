pub mod pledge;
pub mod test_request;

pub use pledge::Entity as Pledges;
pub use test_request::Entity as TestRequests;
