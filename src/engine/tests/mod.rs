mod helpers;
mod tests_boundary;
