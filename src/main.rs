fn main() {
    survey_regrid::cli::run();
}
