mod api_pages_router;
mod unit_io_path_verification;
