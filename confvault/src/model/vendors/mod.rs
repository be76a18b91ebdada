//! Built-in device models.

pub mod cisco_ios;
pub mod http;
pub mod junos;
pub mod linux;

use super::Model;

/// All built-in models, in registration order.
pub fn builtin() -> Vec<Model> {
    vec![cisco_ios::model(), linux::model(), junos::model(), http::model()]
}
