fn main() -> std::process::ExitCode {
  gamecollection_lib::run()
}
