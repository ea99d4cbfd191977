use crate::{
    data::{
        document::{DocumentKind, ScannedDocument},
        student::Gender,
    },
    controller::Reply,
    error::IndukResult,
    form::{Busy, FormState, Notice},
    maud_conveniences::{form_element, notice_toast, simple_form_element, subtitle, title},
    state::IndukState,
};
use axum::extract::State;
use maud::{Markup, html};

const CARD: &str = "bg-gray-800 p-6 rounded-lg shadow-xl w-full";
const BUTTON: &str = "bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded focus:outline-none focus:shadow-outline disabled:opacity-50";
const SECONDARY_BUTTON: &str = "bg-gray-700 hover:bg-gray-600 text-gray-300 font-bold py-2 px-4 rounded focus:outline-none focus:shadow-outline disabled:opacity-50";

pub async fn get_index_route(State(state): State<IndukState>) -> IndukResult<Markup> {
    let form = state.snapshot().await?;

    Ok(state.render(html! {
        div class="max-w-2xl w-full" {
            (render_form(&form, None, state.has_scanner()))
        }
    }))
}

pub async fn internal_get_form(State(state): State<IndukState>) -> IndukResult<Markup> {
    let form = state.snapshot().await?;
    Ok(render_form(&form, None, state.has_scanner()))
}

pub fn render_reply(state: &IndukState, Reply { form, notice }: Reply) -> Markup {
    render_form(&form, notice.as_ref(), state.has_scanner())
}

/// The whole form - every `/internal` route swaps this in place of `#student_form`.
pub fn render_form(form: &FormState, notice: Option<&Notice>, has_scanner: bool) -> Markup {
    let searching = form.busy == Busy::Searching;

    html! {
        div id="student_form" class="flex flex-col space-y-4 w-full" {
            @if let Some(notice) = notice {
                (notice_toast(notice))
            }

            div class=(CARD) {
                (title("Pencarian Data Siswa"))
                div class="flex flex-row space-x-2" {
                    input type="text" id="nomor_induk" name="nomor_induk" value=(form.record.identifier)
                        placeholder="Masukkan nomor induk siswa" autocomplete="off"
                        disabled[searching]
                        hx-post="/internal/identifier" hx-trigger="input changed delay:150ms"
                        hx-target="#student_form" hx-swap="outerHTML"
                        class="shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600" {}
                    button class=(BUTTON) disabled[!form.can_search()]
                        hx-post="/internal/search" hx-include="#nomor_induk"
                        hx-target="#student_form" hx-swap="outerHTML" hx-disabled-elt="this" {
                        @if searching {"..."} @else {"Cari"}
                    }
                }
            }

            @if form.search_attempted {
                (render_student_section(form, has_scanner))
            } @else {
                div class={"bg-gray-700 p-6 rounded-lg w-full text-center text-gray-400"} {
                    p class="text-lg" {"Silakan masukkan Nomor Induk"}
                    p {"Data siswa akan muncul setelah pencarian"}
                }
            }

            @match form.busy {
                Busy::Idle if form.is_scanning() => p class="italic text-gray-300 text-center" {"Memindai..."},
                Busy::Idle => {},
                Busy::Searching => p class="italic text-gray-300 text-center" {"Mencari..."},
                Busy::Saving => p class="italic text-gray-300 text-center" {"Menyimpan..."},
            }
        }
    }
}

fn render_student_section(form: &FormState, has_scanner: bool) -> Markup {
    let enabled = form.fields_editable();
    let idle = form.busy == Busy::Idle;
    let dob = form
        .record
        .date_of_birth
        .map(|dob| dob.to_string())
        .unwrap_or_default();

    html! {
        div class=(CARD) {
            @if form.found {
                (subtitle("✅ Data siswa ditemukan"))
            } @else {
                (subtitle("ℹ️ Data tidak ditemukan, silakan isi manual"))
            }
            hr class="border-gray-600 mb-4";

            form id="record" hx-post="/internal/record" hx-trigger="change"
                hx-target="#student_form" hx-swap="outerHTML" {
                (simple_form_element("nisn", "NISN", enabled, &form.record.national_number, "Nomor Induk Siswa Nasional"))
                (simple_form_element("student_name", "Nama Siswa", enabled, &form.record.name, "Nama lengkap siswa"))
                (form_element("gender", "Jenis Kelamin", html! {
                    div class="flex flex-row space-x-4" {
                        @for gender in Gender::ALL {
                            label class="flex items-center space-x-2 text-gray-300" {
                                input type="radio" name="gender" value=(gender.as_wire_str())
                                    checked[form.record.gender == gender] disabled[!enabled] {}
                                span {(gender)}
                            }
                        }
                    }
                }))
                (form_element("dob", "Tanggal Lahir", html! {
                    input type="date" id="dob" name="dob" value=(dob) disabled[!enabled]
                        class="shadow border rounded py-2 px-3 bg-gray-700 border-gray-600 disabled:opacity-50" {}
                    @if let Some(raw) = &form.record.unparsed_date_of_birth {
                        p class="text-sm text-gray-400 mt-1" {"Tertulis di sheet: " (raw)}
                    }
                }))
            }

            div class="flex flex-col space-y-4 my-4" {
                @for kind in DocumentKind::ALL {
                    (render_scan_section(kind, form.documents.get(kind), idle, has_scanner))
                }
            }

            @let missing = form.missing_for_save();
            @if !missing.is_empty() {
                ul class="text-sm text-yellow-300 mb-2 list-disc list-inside" {
                    @for hint in missing.as_nice_list() {
                        li {(hint)}
                    }
                }
            }

            button class={"w-full " (BUTTON)} disabled[!idle || form.is_scanning()]
                hx-post="/internal/save" hx-target="#student_form" hx-swap="outerHTML" hx-disabled-elt="this" {
                @if form.busy == Busy::Saving {"Menyimpan..."} @else {"Simpan Data Siswa"}
            }
        }
    }
}

fn render_scan_section(
    kind: DocumentKind,
    document: Option<&ScannedDocument>,
    idle: bool,
    has_scanner: bool,
) -> Markup {
    let segment = kind.path_segment();

    html! {
        div class="bg-gray-700 rounded-md p-4 flex flex-col space-y-2" {
            p class="font-semibold" {"Scan " (kind.slot_label())}

            div class="flex flex-row flex-wrap gap-2" {
                @if let Some(document) = document {
                    a class=(SECONDARY_BUTTON) href={"/documents/" (segment)} target="_blank" {"Lihat Dokumen"}
                    @if has_scanner {
                        button class=(BUTTON) disabled[!idle]
                            hx-post={"/internal/scan/" (segment) "?again=true"}
                            hx-target="#student_form" hx-swap="outerHTML" hx-disabled-elt="this" {"Scan Ulang"}
                    } @else {
                        button class=(SECONDARY_BUTTON) disabled[!idle]
                            hx-delete={"/internal/scan/" (segment)}
                            hx-target="#student_form" hx-swap="outerHTML" {"Hapus"}
                    }
                    p class="text-sm text-gray-300 w-full" {
                        "File: " (document.display_name) " (" (document.size_kib()) " KB)"
                    }
                } @else if has_scanner {
                    button class=(BUTTON) disabled[!idle]
                        hx-post={"/internal/scan/" (segment)}
                        hx-target="#student_form" hx-swap="outerHTML" hx-disabled-elt="this" {
                        "Scan " (kind.slot_label())
                    }
                }
            }

            form hx-put={"/internal/scan/" (segment)} hx-encoding="multipart/form-data"
                hx-target="#student_form" hx-swap="outerHTML" class="flex flex-row items-center gap-2" {
                input type="file" name="document" accept=".pdf,.jpg,.jpeg,application/pdf,image/jpeg" disabled[!idle]
                    class="block w-full text-sm text-gray-300 file:mr-4 file:py-2 file:px-4 file:rounded file:border-0 file:text-sm file:font-semibold file:bg-violet-50 file:text-violet-700 hover:file:bg-violet-100" {}
                button type="submit" class=(SECONDARY_BUTTON) disabled[!idle] {"Impor"}
            }
        }
    }
}
