mod auth_state;
mod realtime_message;
