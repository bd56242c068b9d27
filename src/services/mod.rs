pub mod booking;
pub mod payment;
pub mod promo;
pub mod schedule;
pub mod ticket;
pub mod timeout_worker;

pub use booking::{BookingDetails, BookingService, CreateBooking};
pub use payment::{PaymentService, TimeoutOutcome};
pub use promo::{PromoEvaluation, PromoRejection, PromoService};
pub use schedule::{ScheduleService, SeatMap};
pub use ticket::TicketService;
pub use timeout_worker::{process_due_jobs, run_timeout_worker, WorkerSettings};
