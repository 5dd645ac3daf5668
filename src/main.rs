fn main() -> std::process::ExitCode {
    checkin_live_lib::run()
}
