mod tests_upgrade;
mod tests_deadlock;
