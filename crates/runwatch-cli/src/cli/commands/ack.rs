use super::super::args::{AckArgs, AckSub, GlobalArgs};
use crate::exit_codes::{EXIT_SUCCESS, EXIT_TASK_FAILED};
use runwatch_core::model::Acknowledgment;

pub(crate) fn run(args: AckArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let store = super::open_store(global)?;
    match args.cmd {
        AckSub::Add {
            test,
            user,
            devices,
            branches,
            cases,
            note,
        } => {
            let ack = Acknowledgment {
                id: 0,
                test_name: test,
                user,
                devices: devices.into_iter().collect(),
                branches: branches.into_iter().collect(),
                test_case_names: cases.into_iter().collect(),
                note,
            };
            let id = store.insert_acknowledgment(&ack)?;
            eprintln!("acknowledgment added: id={id} test={}", ack.test_name);
            println!("{id}");
        }
        AckSub::List { test } => {
            for ack in store.acknowledgments(&test)? {
                println!("{}", serde_json::to_string(&ack)?);
            }
        }
        AckSub::Remove { id } => {
            if !store.delete_acknowledgment(id)? {
                eprintln!("no acknowledgment with id {id}");
                return Ok(EXIT_TASK_FAILED);
            }
            eprintln!("acknowledgment removed: id={id}");
        }
    }
    Ok(EXIT_SUCCESS)
}
