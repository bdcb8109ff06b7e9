use super::super::args::{GlobalArgs, SubscribeArgs};
use crate::exit_codes::{EXIT_CONFIG_ERROR, EXIT_SUCCESS};

pub(crate) fn run(args: SubscribeArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let email = args.email.trim();
    if !email.contains('@') {
        eprintln!("invalid address: {email}");
        return Ok(EXIT_CONFIG_ERROR);
    }
    let store = super::open_store(global)?;
    if store.add_subscriber(&args.test, email)? {
        eprintln!("subscribed: test={} email={}", args.test, email);
    } else {
        eprintln!("already subscribed: test={} email={}", args.test, email);
    }
    Ok(EXIT_SUCCESS)
}
