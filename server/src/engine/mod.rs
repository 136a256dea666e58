pub mod server_listing;
