pub mod tcp_session;
