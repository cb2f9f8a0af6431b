mod tests_corruption;
mod tests_commit;
