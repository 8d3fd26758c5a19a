pub mod seen_event;
