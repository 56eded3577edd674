use mockall::mock;
use std::{
    io,
    path::Path,
};
use swarmcore::{
    command::{
        CommandOutput,
        Echo,
    },
    error::SinkError,
    refs::RefChange,
};

mock! {
    pub Runner {}
    impl swarmcore::command::Runner for Runner {
        fn run(
            &self,
            argv: &[String],
            working_dir: &Path,
            echo: Echo,
        ) -> io::Result<CommandOutput>;
    }
}

mock! {
    pub ChangeSink {}
    impl swarmcore::sink::ChangeSink for ChangeSink {
        fn apply(
            &self,
            repo_path: &Path,
            changes: &[RefChange],
        ) -> Result<(), SinkError>;
    }
}
