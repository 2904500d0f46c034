mod admin;
mod calc;

pub(crate) use admin::cmd_admin_create;
pub(crate) use calc::cmd_calc;
