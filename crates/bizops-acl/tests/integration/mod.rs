mod concurrency;
mod file_store;
mod scenarios;
