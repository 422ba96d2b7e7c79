mod config;
mod gate;
mod listeners;
mod mock_transport;
mod ws;
