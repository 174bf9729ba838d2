pub mod booking;
pub mod class_batch;
pub mod coupon;

pub use booking::{Booking, BookingStatus, BookingType, Frequency};
pub use class_batch::{BatchFilter, BatchUpdate, ClassBatch, TeacherAvailability};
pub use coupon::{AppliesTo, Coupon, CouponCriteria, CouponUpdate, CouponUsage, DiscountType};
