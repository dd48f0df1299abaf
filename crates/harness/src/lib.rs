pub mod site;

pub use site::TestSite;
