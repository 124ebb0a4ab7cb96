pub mod notification;
pub mod payout;
pub mod ticket;
pub mod transaction;

pub use notification::Notification;
pub use payout::{Payout, PayoutStatus};
pub use ticket::{CreateTicket, Ticket, TicketStatus, VerificationStatus};
pub use transaction::{CreateTransaction, Transaction, TransactionStatus};
