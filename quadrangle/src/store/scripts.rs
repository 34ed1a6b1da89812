use redis::Script;
use std::sync::LazyLock;

pub const PLAN_COMMIT_SCRIPT_BODY: &str = include_str!("../../lua/plan_commit.lua");

pub static PLAN_COMMIT_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(PLAN_COMMIT_SCRIPT_BODY));
