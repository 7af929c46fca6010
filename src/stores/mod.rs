pub mod tracker_hosts;
