pub mod database;
pub mod fees;
pub mod metrics;
pub mod razorpay;
pub mod registry;
pub mod repository;

pub use database::Database;
pub use razorpay::RazorpayClient;
pub use registry::RegistryClient;
pub use repository::MarketplaceRepository;
