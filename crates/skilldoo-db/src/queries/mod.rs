mod messages;
mod ratings;
mod reports;
mod skills;
mod swaps;
mod users;
