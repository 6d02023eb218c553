pub mod auth;
pub mod consultation;
pub mod doctor;
pub mod error;
pub mod message;
pub mod payment;
pub mod response;
pub mod user;

pub use auth::{AuthUser, Role, RoleSet};
pub use consultation::{Consultation, ConsultationScope, ConsultationStatus, NewConsultation, StatusChange};
pub use doctor::{DoctorListing, DoctorProfile, DoctorProfilePatch, NewDoctorProfile};
pub use error::{AppError, FieldError};
pub use message::{Message, MessageType, NewMessage};
pub use payment::{NewPayment, Payment, PaymentStatus, PaymentUpdate};
pub use response::{ApiResponse, Page, Pagination};
pub use user::{NewUser, User, UserFilter, UserPatch, UserSummary, UserWithProfile};
