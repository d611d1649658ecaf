pub mod fetch_mail_libs;
pub mod inbox_manager_libs;
