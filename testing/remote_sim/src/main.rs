use std::{
    env,
    io::{self, Write},
    process::ExitCode,
    thread,
    time::Duration,
};

// Each argument is an action: `out:TEXT`, `err:TEXT`, `sleep:MS` or
// `exit:N`.  `\n` and `\r` in TEXT are unescaped.
fn main() -> io::Result<ExitCode> {
    let mut code = 0u8;
    for arg in env::args().skip(1) {
        let (action, value) = arg.split_once(':').unwrap_or((arg.as_str(), ""));
        let text = value.replace("\\n", "\n").replace("\\r", "\r");
        match action {
            "out" => {
                let mut stdout = io::stdout();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            "err" => {
                let mut stderr = io::stderr();
                stderr.write_all(text.as_bytes())?;
                stderr.flush()?;
            }
            "sleep" => thread::sleep(Duration::from_millis(value.parse().unwrap_or(0))),
            "exit" => code = value.parse().unwrap_or(255),
            _ => (),
        }
    }
    Ok(ExitCode::from(code))
}
