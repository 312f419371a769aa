pub mod admin;
pub mod debounce;
pub mod demo_store;
pub mod feed;
pub mod http_client;
pub mod persist;
pub mod pipeline;
pub mod rating;
pub mod remote;
pub mod session;
pub mod settings;
pub mod state;
pub mod virtual_list;
