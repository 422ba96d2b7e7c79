mod auth_client;
mod gate_driver;
mod helpers;
mod stomp_transport;
