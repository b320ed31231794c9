pub mod request_steps;
