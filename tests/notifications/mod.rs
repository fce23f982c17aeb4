mod cross_root_case;
mod reentrant_listener_case;
