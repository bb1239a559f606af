mod boundary;
mod http;
mod utils;
