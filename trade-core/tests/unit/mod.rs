mod domain_period;
mod domain_roles;
mod message_dedup;
