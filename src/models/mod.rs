pub mod booking;
pub mod discount;
pub mod schedule;
pub mod service;

pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use discount::{
    AppliesTo, CustomerDiscount, Discount, DiscountType, DiscountUsage, TargetType,
};
pub use schedule::{TimeOff, WorkingSchedule};
pub use service::{Service, ServiceOffering};
