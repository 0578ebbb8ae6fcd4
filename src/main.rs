fn main() -> std::process::ExitCode {
    folder_color_lib::run()
}
