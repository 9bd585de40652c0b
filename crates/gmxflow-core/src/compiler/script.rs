/// Renders a compiled command list as a standalone bash script.
///
/// `prelude` lines (environment setup such as sourcing GMXRC) are emitted
/// after `set -e` and before the first command. Commands are separated by a
/// blank line.
pub fn to_bash_script(commands: &[String], prelude: &[String]) -> String {
    let mut script = String::from("#!/bin/bash\n\nset -e\n");
    if !prelude.is_empty() {
        script.push('\n');
        for line in prelude {
            script.push_str(line);
            script.push('\n');
        }
    }
    for command in commands {
        script.push('\n');
        script.push_str(command);
        script.push('\n');
    }
    script
}
